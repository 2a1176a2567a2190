//! Keystone Store - resolution of extension coordinates into artifact files
//!
//! An extension is named by a coordinate (`group:artifact:version`). Resolving it walks
//! the artifact's declared dependencies and produces an [`ArtifactSet`]: the ordered
//! list of local descriptor files for the whole dependency closure.
//!
//! Descriptors are looked up in a local repository first and fetched from remote
//! repositories (plain directories, `file://` or `http(s)://` URLs) otherwise. Fetched
//! descriptors are cached in the local repository.
//!
//! # Examples
//!
//! ```rust,no_run
//! use keystone_store::{ArtifactResolver, Coordinate, DiagnosticSink, RepositoryResolver};
//!
//! # fn example() -> Result<(), keystone_store::ResolutionError> {
//! let resolver = RepositoryResolver::new(
//!     "/var/cache/keystone/repository",
//!     &["https://repo.example.org/extensions/".to_string()],
//!     DiagnosticSink::Discard,
//! )?;
//!
//! let coordinate: Coordinate = "org.example:ext:1.0".parse()?;
//! for artifact in resolver.resolve(&coordinate)?.iter() {
//!     println!("{} -> {}", artifact.coordinate(), artifact.file().display());
//! }
//! # Ok(())
//! # }
//! ```
pub mod artifact;
pub mod coordinate;
pub mod descriptor;
pub mod error;
pub mod local;
pub mod remote;
pub mod resolver;

pub use artifact::{Artifact, ArtifactSet};
pub use coordinate::Coordinate;
pub use descriptor::{ArtifactDescriptor, DescriptorReadError};
pub use error::{RemoteError, ResolutionError, Result};
pub use local::LocalRepository;
pub use remote::{FileRepository, RemoteRepository, open_remote};
pub use resolver::{ArtifactResolver, DiagnosticSink, RepositoryResolver};

#[cfg(feature = "http")]
pub use remote::HttpRepository;
