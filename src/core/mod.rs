//! Core packaging functionality
//!
//! Target resolution, archive building, buildpackage assembly and
//! registry publishing.

pub mod archive;
pub mod buildpackage;
pub mod definition;
pub mod pipeline;
pub mod publisher;
pub mod targets;

pub use archive::{Archive, ArchiveBuilder};
pub use buildpackage::{Buildpackage, BuildpackageAssembler, PackagingOutcome};
pub use definition::{ArtifactKind, Definition, PackagerVariant};
pub use pipeline::{PackageReport, resolve_targets, run_package, run_publish};
pub use publisher::{ManifestList, PublishOutcome, PublishState, PublishedImage, Publisher};
pub use targets::{Target, TargetResolver};
