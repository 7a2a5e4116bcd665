//! JSON-over-HTTP compute platform adapter.
//!
//! Speaks a minimal resource API:
//!
//! | call   | request                            |
//! |--------|------------------------------------|
//! | create | `POST   {base}/resources`          |
//! | start  | `POST   {base}/resources/{id}/start` |
//! | status | `GET    {base}/resources/{id}`     |
//! | resize | `PATCH  {base}/resources/{id}`     |
//! | delete | `DELETE {base}/resources/{id}`     |

pub mod client;
pub mod dto;
pub mod settings;

pub use client::HttpPlatform;
pub use settings::PlatformConfig;
