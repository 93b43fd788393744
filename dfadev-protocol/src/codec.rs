//! Encoder and decoder for DCP frames and messages.

use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{Request, Response};
use bytes::BytesMut;

/// Encodes requests and responses into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a frame.
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        Frame::from_json(request)?.encode()
    }

    /// Encodes a response into a frame.
    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        Frame::from_json(response)?.encode()
    }
}

/// Decodes frames into requests and responses.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        self.decode_message()
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        self.decode_message()
    }

    fn decode_message<T: serde::de::DeserializeOwned>(
        &mut self,
    ) -> Result<Option<T>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => {
                let payload =
                    std::str::from_utf8(&frame.payload).map_err(|_| ProtocolError::InvalidUtf8)?;
                Ok(Some(serde_json::from_str(payload)?))
            }
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Operation, ResponseStatus, WriteParams};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encoder_decoder_roundtrip() {
        let request = Request::new("42", Operation::Ping);
        let encoded = Encoder::encode_request(&request).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);

        let decoded = decoder.decode_request().unwrap().unwrap();
        assert_eq!(decoded.id, "42");
        assert_eq!(decoded.op, Operation::Ping);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_frame_decoding() {
        let request = Request::new("1", Operation::Write)
            .with_params(serde_json::to_value(WriteParams { data: b"abc".to_vec() }).unwrap());
        let encoded = Encoder::encode_request(&request).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded[..10]);
        assert!(decoder.decode_request().unwrap().is_none());

        decoder.extend(&encoded[10..]);
        let decoded = decoder.decode_request().unwrap().unwrap();
        assert_eq!(decoded.params["data"], json!([97, 98, 99]));
    }

    #[test]
    fn test_encode_response() {
        let response = Response::ok("req-1", json!({"written": 3}));
        let encoded = Encoder::encode_response(&response).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);
        let decoded = decoder.decode_response().unwrap().unwrap();

        assert_eq!(decoded.id, "req-1");
        assert_eq!(decoded.status, ResponseStatus::Ok);
    }

    #[test]
    fn test_invalid_utf8_payload() {
        let frame = Frame::new(bytes::Bytes::from_static(&[0xff, 0xfe]));
        let mut decoder = Decoder::new();
        decoder.extend(&frame.encode().unwrap());
        assert!(matches!(
            decoder.decode_request(),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_decoder_buffered() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(b"some data");
        assert_eq!(decoder.buffered(), 9);

        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }

    proptest! {
        #[test]
        fn prop_split_stream_decodes_every_request(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
            chunk in 1usize..64,
        ) {
            let mut stream = Vec::new();
            for (i, data) in payloads.iter().enumerate() {
                let request = Request::new(i.to_string(), Operation::Write)
                    .with_params(serde_json::to_value(WriteParams { data: data.clone() }).unwrap());
                stream.extend_from_slice(&Encoder::encode_request(&request).unwrap());
            }

            let mut decoder = Decoder::new();
            let mut decoded = Vec::new();
            for piece in stream.chunks(chunk) {
                decoder.extend(piece);
                while let Some(request) = decoder.decode_request().unwrap() {
                    decoded.push(request);
                }
            }

            prop_assert_eq!(decoded.len(), payloads.len());
            for (request, data) in decoded.iter().zip(&payloads) {
                let params: WriteParams = serde_json::from_value(request.params.clone()).unwrap();
                prop_assert_eq!(&params.data, data);
            }
        }
    }
}
