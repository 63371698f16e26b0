mod api;
mod kv;

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

pub use self::api::{Api, ApiError, ApiResponse};
pub use self::kv::{decode_token, KeyNamespace, KvError, KvKey, TokenStore, TOKEN_KEY};

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
}
