pub mod error;
pub mod extract;
pub mod fetcher;
pub mod identity;
pub mod result;
pub mod site;
pub mod throttle;

pub use error::{BlockReason, FetchError, ScanError};
pub use extract::{ListingExtractor, PageExtraction};
pub use fetcher::PageFetcher;
pub use identity::{Identity, IdentityPool, load_proxies};
pub use result::{FetchedPage, NormalizedJob};
pub use site::SiteProfile;
pub use throttle::{Throttle, ThrottleConfig};
