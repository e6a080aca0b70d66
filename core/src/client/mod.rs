pub mod http;

pub use http::HttpMissionService;
