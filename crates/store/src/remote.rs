use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use url::Url;

use crate::error::{RemoteError, ResolutionError, Result};

/// A source of artifact descriptors, addressed by repository-relative paths.
pub trait RemoteRepository: Send + Sync {
    /// Identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// Fetches the file at `path`. `Ok(None)` means the repository answered but does
    /// not have the file.
    fn fetch(&self, path: &str) -> std::result::Result<Option<Vec<u8>>, RemoteError>;
}

/// Opens a remote repository from a configured location.
///
/// `http://` and `https://` locations need the `http` feature; `file://` URLs and plain
/// paths are read from the file system.
pub fn open_remote(location: &str) -> Result<Box<dyn RemoteRepository>> {
    let invalid = |reason: String| ResolutionError::InvalidRepository {
        location: location.to_string(),
        reason,
    };

    if location.starts_with("http://") || location.starts_with("https://") {
        #[cfg(feature = "http")]
        {
            let url = Url::parse(location).map_err(|e| invalid(e.to_string()))?;
            return Ok(Box::new(HttpRepository::new(url)));
        }
        #[cfg(not(feature = "http"))]
        {
            return Err(invalid("http repositories need the `http` feature".to_string()));
        }
    }

    if location.starts_with("file://") {
        let url = Url::parse(location).map_err(|e| invalid(e.to_string()))?;
        let path = url
            .to_file_path()
            .map_err(|_| invalid("not a local file URL".to_string()))?;
        return Ok(Box::new(FileRepository::new(location, path)));
    }

    if location.contains("://") {
        return Err(invalid("unsupported scheme".to_string()));
    }
    if location.trim().is_empty() {
        return Err(invalid("location is empty".to_string()));
    }
    Ok(Box::new(FileRepository::new(location, location)))
}

/// A repository rooted at a local directory.
///
/// A missing root directory makes the repository unreachable, while a missing file
/// inside an existing root is simply not found.
#[derive(Debug, Clone)]
pub struct FileRepository {
    id: String,
    root: PathBuf,
}

impl FileRepository {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }
}

impl RemoteRepository for FileRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, path: &str) -> std::result::Result<Option<Vec<u8>>, RemoteError> {
        if !self.root.is_dir() {
            return Err(RemoteError::Unreachable {
                repository: self.id.clone(),
                reason: format!("'{}' is not a directory", self.root.display()),
            });
        }

        let file = path
            .split('/')
            .fold(self.root.clone(), |file, segment| file.join(segment));
        match fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RemoteError::Unreachable {
                repository: self.id.clone(),
                reason: format!("failed to read '{}': {}", file.display(), e),
            }),
        }
    }
}

#[cfg(feature = "http")]
pub use self::http::HttpRepository;

#[cfg(feature = "http")]
mod http {
    use reqwest::StatusCode;
    use reqwest::blocking::Client;
    use url::Url;

    use super::RemoteRepository;
    use crate::error::RemoteError;

    /// A repository served over HTTP(S).
    pub struct HttpRepository {
        id: String,
        base: Url,
        client: Client,
    }

    impl HttpRepository {
        pub fn new(mut base: Url) -> Self {
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            Self {
                id: base.to_string(),
                base,
                client: Client::new(),
            }
        }

        fn unreachable(&self, reason: impl ToString) -> RemoteError {
            RemoteError::Unreachable {
                repository: self.id.clone(),
                reason: reason.to_string(),
            }
        }
    }

    impl RemoteRepository for HttpRepository {
        fn id(&self) -> &str {
            &self.id
        }

        fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, RemoteError> {
            let url = self.base.join(path).map_err(|e| self.unreachable(e))?;
            let response = self
                .client
                .get(url)
                .send()
                .map_err(|e| self.unreachable(e))?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    let bytes = response.bytes().map_err(|e| self.unreachable(e))?;
                    Ok(Some(bytes.to_vec()))
                }
                status => Err(self.unreachable(format!("unexpected status {status}"))),
            }
        }
    }

}
