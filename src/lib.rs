//! # Bugtrail
//!
//! Correlates open defect reports from a work-item tracker with recent
//! source-control commits, surfacing the commits most likely responsible for
//! each defect.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────┐
//! │  Tracker  │   │  GitHub   │
//! │  (ADO)    │   │  commits  │
//! └─────┬─────┘   └─────┬─────┘
//!       └───────┬───────┘
//!               ▼
//!        ┌─────────────┐   ┌──────────────┐
//!        │  Pipeline   │──▶│ LLM analysis │ (optional)
//!        │ rank + text │   └──────────────┘
//!        └──────┬──────┘
//!        ┌──────┴──────┐
//!        ▼             ▼
//!   ┌─────────┐  ┌──────────┐
//!   │   CLI   │  │ HTTP API │
//!   └─────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bugtrail triage                       # rank suspects for recent bugs
//! bugtrail triage --bug-id 12345        # focus on one bug (+AI if enabled)
//! bugtrail serve api                    # start the dashboard API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`text`] | Rich-text normalization and truncation |
//! | [`rank`] | Tokenization and heuristic relevance scoring |
//! | [`pipeline`] | Fetch, score, and enrich orchestration |
//! | [`tracker`] | Azure DevOps work-item client |
//! | [`commits`] | GitHub commit client |
//! | [`analysis`] | Optional LLM enrichment |
//! | [`traits`] | Collaborator seams for testing |
//! | [`server`] | Dashboard HTTP API |

pub mod analysis;
pub mod commits;
pub mod config;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod rank;
pub mod server;
pub mod text;
pub mod tracker;
pub mod traits;
pub mod triage;
