//! Postfix Patcher: stamp OpenClaw replies with provider, model and identity
//!
//! A marker-based patcher for the bundled JavaScript in an installed OpenClaw
//! package. Three patches move the response prefix to the end of outbound
//! text, shorten the identity placeholder and inject alias-resolved model
//! stamps into the reply prefix context.
//!
//! # Architecture
//!
//! Every text change compiles down to a single primitive: [`Edit`], a
//! verified byte-span replacement. Patches only decide where the span is
//! (literal anchor first, regex fallback second) and what goes in it.
//!
//! # Safety
//!
//! - A marker already present means the patch is skipped
//! - Writes are atomic and refuse files changed since they were read
//! - Every written bundle is syntax-checked and rolled back on failure
//! - Writes never leave the package's `dist/` directory
//!
//! # Example
//!
//! ```
//! use postfix_patcher::{AliasConfig, PatchEngine, PatchStatus};
//!
//! let engine = PatchEngine::new(&AliasConfig::builtin(), false);
//! let out = engine.apply("console.log(1);\n");
//! assert_eq!(out.statuses.postfix, PatchStatus::NoMatch);
//! assert!(!out.changed);
//! ```

pub mod alias;
pub mod apply;
pub mod commit;
pub mod config;
pub mod discover;
pub mod edit;
pub mod patch;
pub mod prefix;
pub mod report;
pub mod safety;
pub mod stamp;
pub mod validate;

// Re-exports
pub use alias::{derive_alias, lookup_alias, normalize_model_name, resolve_collisions};
pub use apply::{run_batch, BatchOptions, FileOutcome, FileReport};
pub use commit::{CommitError, CommitOutcome, Committer, TargetFile};
pub use config::{load_from_path, load_from_str, AliasConfig, ConfigError, PackConfig};
pub use edit::{Edit, EditError, EditVerification};
pub use patch::{PatchEngine, PatchKind, PatchStatus, PatchStatuses};
pub use safety::{DistGuard, SafetyError};
pub use stamp::{render_template, StampParts};
pub use validate::{NodeValidator, OnValidatorMissing, SyntaxValidator, Validation, ValidatorError};
