//! Mock HLS origin built on wiremock

use aes::Aes128;
use cbc::Encryptor;
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// AES-128 key the mock origin hands out
pub const KEY: [u8; 16] = *b"0123456789abcdef";

/// Deterministic body for segment `i`
pub fn segment_payload(i: usize) -> Vec<u8> {
    format!("<payload {i:03}>").repeat(8).into_bytes()
}

/// Concatenation of the first `n` segment payloads
pub fn expected_payload(n: usize) -> Vec<u8> {
    (0..n).flat_map(segment_payload).collect()
}

/// AES-128-CBC with PKCS#7 padding under [`KEY`]
pub fn encrypt(plaintext: &[u8], iv: &[u8; 16]) -> Vec<u8> {
    Encryptor::<Aes128>::new((&KEY).into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// IV derived from a media sequence number
pub fn sequence_iv(sequence: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[8..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

/// Media playlist body listing `seg0.ts..seg{n-1}.ts`, 4 seconds each
pub fn ts_playlist(n: usize) -> String {
    let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n");
    for i in 0..n {
        body.push_str(&format!("#EXTINF:4.0,\nseg{i}.ts\n"));
    }
    body.push_str("#EXT-X-ENDLIST\n");
    body
}

/// Wiremock server playing the part of an HLS origin
pub struct HlsOrigin {
    pub server: MockServer,
}

impl HlsOrigin {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Absolute URL for a server path
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.server.uri(), route)
    }

    /// Serve a playlist body
    pub async fn playlist(&self, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/vnd.apple.mpegurl")
                    .set_body_string(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve raw bytes
    pub async fn bytes(&self, route: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// Serve raw bytes, asserting on drop that they were fetched exactly `times`
    pub async fn bytes_expecting(&self, route: &str, body: Vec<u8>, times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer a specific `Range` request with 206 and the given slice
    pub async fn range(&self, route: &str, range: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("Range", range))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answer with `status` for the next `times` requests, ahead of other mocks
    pub async fn fail_first(&self, route: &str, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Answer with `status` forever, ahead of other mocks
    pub async fn fail_always(&self, route: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Serve bytes after a delay
    pub async fn slow(&self, route: &str, body: Vec<u8>, delay: std::time::Duration) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body).set_delay(delay))
            .mount(&self.server)
            .await;
    }

    /// Serve a plain TS stream of `n` segments under `dir`, returning its playlist URL
    pub async fn ts_stream(&self, dir: &str, n: usize) -> String {
        let route = format!("{dir}/index.m3u8");
        self.playlist(&route, &ts_playlist(n)).await;
        for i in 0..n {
            self.bytes(&format!("{dir}/seg{i}.ts"), segment_payload(i)).await;
        }
        self.url(&route)
    }
}
