// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

/// Errors that can occur while fetching the raw bytes of a clip.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid origin '{0}': {1}")]
    InvalidOrigin(String, String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(StatusCode),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Retrieves the bytes stored at an asset path such as /audio/beat.mp3.
#[async_trait]
pub trait AssetFetcher: fmt::Display + Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches clips from an HTTP origin.
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: &str) -> Result<HttpFetcher, FetchError> {
        let origin = Url::parse(origin)
            .map_err(|e| FetchError::InvalidOrigin(origin.to_string(), e.to_string()))?;
        if origin.cannot_be_a_base() {
            return Err(FetchError::InvalidOrigin(
                origin.to_string(),
                "not a base URL".to_string(),
            ));
        }

        Ok(HttpFetcher {
            client: reqwest::Client::new(),
            origin,
        })
    }

    /// Resolves an asset path against the origin root.
    fn url(&self, path: &str) -> Result<Url, FetchError> {
        self.origin
            .join(path)
            .map_err(|e| FetchError::InvalidOrigin(self.origin.to_string(), e.to_string()))
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url(path)?;
        debug!(url = %url, "Fetching clip.");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

impl fmt::Display for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)
    }
}

/// Reads clips from a directory laid out like the web root.
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new<P: AsRef<Path>>(root: P) -> DirectoryFetcher {
        DirectoryFetcher {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetFetcher for DirectoryFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(path);
        debug!(path = %path.display(), "Reading clip.");
        tokio::fs::read(&path)
            .await
            .map_err(|source| FetchError::Io { path, source })
    }
}

impl fmt::Display for DirectoryFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    /// Serves three bytes at /audio/beat.mp3 and 404 everywhere else, one request per connection.
    async fn serve_beat() -> Result<(String, tokio::task::JoinHandle<()>), io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let origin = format!("http://{}", listener.local_addr()?);
        let server = tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut buffer = [0u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(read) => request.extend_from_slice(&buffer[..read]),
                    }
                }

                let response: &[u8] = if request.starts_with(b"GET /audio/beat.mp3 ") {
                    b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc"
                } else {
                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                };
                let _ = socket.write_all(response).await;
                let _ = socket.shutdown().await;
            }
        });
        Ok((origin, server))
    }

    #[tokio::test]
    async fn test_http_fetcher() -> Result<(), Box<dyn Error>> {
        let (origin, server) = serve_beat().await?;
        let fetcher = HttpFetcher::new(&origin)?;

        assert_eq!(b"abc".to_vec(), fetcher.fetch("/audio/beat.mp3").await?);

        let missing = fetcher.fetch("/audio/shi.mp3").await;
        assert!(matches!(
            missing,
            Err(FetchError::Status(status)) if status == StatusCode::NOT_FOUND
        ));

        server.abort();
        Ok(())
    }

    #[tokio::test]
    async fn test_directory_fetcher() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("audio"))?;
        fs::write(dir.path().join("audio").join("beat.mp3"), [1u8, 2, 3])?;

        let fetcher = DirectoryFetcher::new(dir.path());
        assert_eq!(vec![1u8, 2, 3], fetcher.fetch("/audio/beat.mp3").await?);

        let missing = fetcher.fetch("/audio/shi.mp3").await;
        assert!(matches!(
            missing,
            Err(FetchError::Io { ref path, .. }) if path.ends_with("audio/shi.mp3")
        ));
        Ok(())
    }

    #[test]
    fn test_http_urls() -> Result<(), Box<dyn Error>> {
        let fetcher = HttpFetcher::new("http://localhost:5173")?;
        assert_eq!(
            "http://localhost:5173/audio/ko-1.mp3",
            fetcher.url("/audio/ko-1.mp3")?.as_str()
        );

        // Asset paths are absolute, so they always resolve against the host root.
        let fetcher = HttpFetcher::new("https://example.com/app/")?;
        assert_eq!(
            "https://example.com/audio/n.mp3",
            fetcher.url("/audio/n.mp3")?.as_str()
        );

        assert!(matches!(
            HttpFetcher::new("not a url"),
            Err(FetchError::InvalidOrigin(..))
        ));
        Ok(())
    }
}
