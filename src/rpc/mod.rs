pub mod channel;
pub mod protocol;
pub mod stdio;

pub use channel::{channel, serve, FocusedSurface, RequestHandler, RpcClient, RpcListener};
pub use protocol::{
    authorize_and_decode, Envelope, Request, Response, Sender, UNAUTHORIZED_SENDER,
    UNKNOWN_ACTION,
};
