//! Protocol encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dfadev_protocol::frame::Frame;
use dfadev_protocol::message::{Operation, ReadResult, Request, Response, WriteParams};
use dfadev_protocol::{Decoder, Encoder};

fn write_request(size: usize) -> Request {
    let params = WriteParams {
        data: vec![b'1'; size],
    };
    Request::new("bench-1", Operation::Write).with_params(serde_json::to_value(params).unwrap())
}

fn read_response() -> Response {
    let result = ReadResult {
        data: b"YYYY".to_vec(),
    };
    Response::ok("bench-1", serde_json::to_value(result).unwrap())
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [16, 1024, 65536] {
        let frame = Frame::new(Bytes::from(vec![b'x'; size]));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [16, 1024, 65536] {
        let encoded = Frame::new(Bytes::from(vec![b'x'; size])).encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_write_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_request");

    for size in [16, 1024, 4096] {
        let request = write_request(size);
        let encoded = Encoder::encode_request(&request).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &request, |b, request| {
            b.iter(|| black_box(Encoder::encode_request(request).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                black_box(decoder.decode_request().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_read_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_response");
    let response = read_response();
    let encoded = Encoder::encode_response(&response).unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("encode", |b| {
        b.iter(|| black_box(Encoder::encode_response(&response).unwrap()));
    });
    group.bench_function("decode", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new();
            decoder.extend(&encoded);
            black_box(decoder.decode_response().unwrap())
        });
    });

    group.finish();
}

fn bench_crc32c(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32c");

    for size in [256, 65536] {
        let data = vec![0x42u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(crc32c::crc32c(data)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_write_request,
    bench_read_response,
    bench_crc32c,
);

criterion_main!(benches);
