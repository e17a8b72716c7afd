pub mod fetcher;
pub mod pagination;
pub mod traits;

pub use fetcher::HttpBrowserLauncher;
pub use pagination::{HarvestReport, PaginationController, RowSink};
pub use traits::{Browser, BrowserLauncher, RowHandle};
