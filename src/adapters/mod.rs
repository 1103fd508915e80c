// Adapters layer: concrete implementations for external systems (storage, http, browser, geocoding).

pub mod http;
pub mod nominatim;
pub mod storage;
pub mod webdriver;

pub use http::HttpRedirectResolver;
pub use nominatim::NominatimGeocoder;
pub use storage::LocalStorage;
pub use webdriver::WebDriverRedirectResolver;
