//! Anonymous blob reads through pre-authorized fetch URLs.

use crate::error::PipelineError;
use futures::TryStreamExt;
use reqwest::Client;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::info;

const CHUNK_SIZE: usize = 64 * 1024;

/// Source downloader. Its client has no whole-request timeout: a transfer
/// fails when no byte arrives for `idle_timeout`, or when it runs past `total_timeout`.
#[derive(Clone, Debug)]
pub struct BlobFetcher {
    client: Client,
    idle_timeout: Duration,
    total_timeout: Duration,
}

impl BlobFetcher {
    pub fn new(idle_timeout: Duration, total_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(idle_timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self::with_client(client, idle_timeout, total_timeout))
    }

    pub fn with_client(client: Client, idle_timeout: Duration, total_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
            total_timeout,
        }
    }

    /// Stream the object behind `url` into `local_path`.
    pub async fn fetch_to_file(&self, url: &str, local_path: &Path) -> Result<(), PipelineError> {
        match tokio::time::timeout(self.total_timeout, self.transfer(url, local_path)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::download(format!(
                "source fetch exceeded {:?}",
                self.total_timeout
            ))),
        }
    }

    async fn transfer(&self, url: &str, local_path: &Path) -> Result<(), PipelineError> {
        let response = tokio::time::timeout(self.idle_timeout, self.client.get(url).send())
            .await
            .map_err(|_| PipelineError::download("source fetch got no response"))?
            .map_err(|e| PipelineError::download(format!("source fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::download(format!(
                "source fetch returned {}",
                status
            )));
        }

        async {
            let body = response
                .bytes_stream()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err));
            let body_reader = StreamReader::new(body);
            futures::pin_mut!(body_reader);

            let mut file = BufWriter::new(File::create(local_path).await?);
            let mut buf = vec![0u8; CHUNK_SIZE];
            let mut bytes = 0u64;
            loop {
                let read = tokio::time::timeout(self.idle_timeout, body_reader.read(&mut buf))
                    .await
                    .map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no data for {:?}", self.idle_timeout),
                        )
                    })??;
                if read == 0 {
                    break;
                }
                file.write_all(&buf[..read]).await?;
                bytes += read as u64;
            }
            file.flush().await?;

            Ok::<_, io::Error>(bytes)
        }
        .await
        .map(|bytes| info!(path = %local_path.display(), bytes, "Source downloaded"))
        .map_err(|e| {
            PipelineError::download(format!(
                "failed to write {}: {}",
                local_path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(idle_ms: u64) -> BlobFetcher {
        BlobFetcher::new(Duration::from_millis(idle_ms), Duration::from_secs(30)).unwrap()
    }

    /// Serve one response of `chunks` two-byte chunks, pausing `pause` before each.
    async fn trickle_server(chunks: usize, pause: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                chunks * 2
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for _ in 0..chunks {
                tokio::time::sleep(pause).await;
                if socket.write_all(b"ab").await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
            }
        });
        format!("http://{}/movie.mp4", addr)
    }

    #[tokio::test]
    async fn test_streams_body_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/users/42/movie.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake mp4 bytes".to_vec()))
            .mount(&server)
            .await;
        let temp = tempdir().unwrap();
        let target = temp.path().join("movie.mp4");

        fetcher(5_000)
            .fetch_to_file(
                &format!("{}/videos/users/42/movie.mp4?sig=abc", server.uri()),
                &target,
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"fake mp4 bytes");
    }

    #[tokio::test]
    async fn test_expired_url_is_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let temp = tempdir().unwrap();

        let result = fetcher(5_000)
            .fetch_to_file(&server.uri(), &temp.path().join("x.mp4"))
            .await;

        assert!(matches!(result, Err(PipelineError::Download(_))));
    }

    #[tokio::test]
    async fn test_slow_steady_transfer_outlasts_idle_timeout() {
        // Ten chunks 100ms apart: about a second in total against a 400ms idle timeout
        let url = trickle_server(10, Duration::from_millis(100)).await;
        let temp = tempdir().unwrap();
        let target = temp.path().join("v.mp4");

        fetcher(400).fetch_to_file(&url, &target).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"ab".repeat(10));
    }

    #[tokio::test]
    async fn test_stalled_transfer_is_download_error() {
        let url = trickle_server(2, Duration::from_millis(1_000)).await;
        let temp = tempdir().unwrap();

        let result = fetcher(200)
            .fetch_to_file(&url, &temp.path().join("v.mp4"))
            .await;

        match result {
            Err(PipelineError::Download(msg)) => assert!(msg.contains("no data")),
            other => panic!("expected stalled download error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_total_timeout_bounds_the_transfer() {
        let url = trickle_server(20, Duration::from_millis(50)).await;
        let temp = tempdir().unwrap();
        let fetcher = BlobFetcher::new(Duration::from_millis(400), Duration::from_millis(300)).unwrap();

        let result = fetcher.fetch_to_file(&url, &temp.path().join("v.mp4")).await;

        match result {
            Err(PipelineError::Download(msg)) => assert!(msg.contains("exceeded")),
            other => panic!("expected total timeout, got {:?}", other),
        }
    }
}
