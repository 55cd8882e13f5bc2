pub mod abort;
pub mod config;
pub mod context;
pub mod engine;
pub mod exception;
pub mod file;
pub mod matcher;
pub mod param;
pub mod router;
pub mod server;
pub mod util;

pub use abort::AbortSignal;
pub use config::Config;
pub use context::{Ctx, Payload};
pub use engine::tcp::{TcpEngine, TcpListenSocket};
pub use engine::{BodyChunk, Engine, RawHandler, RawRequest, RawResponse};
pub use exception::Exception;
pub use file::SendFileOptions;
pub use param::{HttpEncoding, HttpMethod};
pub use router::{Handler, Route, Router, Routes};
pub use server::Server;
pub use util::HtmlBuilder;
