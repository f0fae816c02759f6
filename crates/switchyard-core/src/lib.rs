//! # Switchyard Core
//!
//! Runtime for the Switchyard multi-provider chat gateway.
//!
//! ```text
//! switchyard-core/src/
//! ├── gateway/
//! │   ├── chat/            # ChatGateway: quota -> breaker -> retry -> fallback
//! │   ├── circuit_breaker/ # per-provider Closed/Open/HalfOpen gate
//! │   ├── quota/           # daily tokens + per-minute request buckets
//! │   ├── health/          # periodic provider probes
//! │   ├── reload/          # bus-driven or polled registry refresh
//! │   ├── registry.rs      # atomically swapped provider set
//! │   ├── loader.rs        # store rows + credentials -> provider handles
//! │   └── stream.rs        # bounded closable chunk channel
//! └── modules/
//!     ├── repository.rs    # GatewayStore contract
//!     ├── gateway_pg.rs    # PostgreSQL store
//!     ├── memory_store.rs  # in-process store
//!     ├── config.rs        # JSON config file + env overrides
//!     └── logger.rs        # tracing bootstrap
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Lock guards in async code require careful lifetime management"
)]
#![allow(clippy::redundant_else, reason = "Explicit else blocks improve readability in complex control flow")]
#![allow(clippy::implicit_clone, reason = "Explicit .clone() vs .to_string() is stylistic")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::assertions_on_result_states
    )
)]

pub mod error;
pub mod gateway;
pub mod modules;

pub use modules::{config, logger};

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use gateway::{ChatGateway, GatewayService};
pub use modules::repository::{GatewayStore, StoreError, StoreResult};
pub use switchyard_types::{GatewayConfig, GatewayError};
