// =============================================================================
// API Module — REST surface of the Helios A/B engine
// =============================================================================
//
// `rest` builds the axum router and handlers; `auth` provides the bearer
// token extractor used by every non-public route.

pub mod auth;
pub mod rest;
