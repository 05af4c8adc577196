//! Paged query orchestration
//!
//! ```text
//! PageView::load
//!      │  generation stamp
//!      ▼
//! PageOrchestrator::fetch_page
//!      │
//!      ├── RequestDescriptor   filters + date range + limit/skip/count
//!      ├── DataSource::fetch   {items, total}
//!      └── ResolutionCache     reference ids → entities
//!      │
//!      ▼
//! applied only if still latest and not cancelled
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerscope::query::{HttpDataSource, PageOrchestrator, PageQuery, PageView};
//!
//! let source = Arc::new(HttpDataSource::from_config(&config.api)?);
//! let orchestrator = PageOrchestrator::<TokenPool>::new("default", source);
//! let view: PageView<TokenTransfer, TokenPool> = PageView::new();
//!
//! view.load(&orchestrator, &PageQuery::new("tokens/transfers", 25)).await?;
//! ```

pub mod cancel;
pub mod orchestrator;
pub mod request;
pub mod source;
pub mod view;

pub use cancel::CancellationToken;
pub use orchestrator::{
    EnrichedRow, PageOrchestrator, PagedResult, Reference, Referencing, DEFAULT_MAX_PAGE_SIZE,
};
pub use request::{HistogramRequest, PageQuery, RequestDescriptor};
pub use source::{ApiEntityFetcher, DataSource, HttpDataSource};
pub use view::{LoadOutcome, PageView};
