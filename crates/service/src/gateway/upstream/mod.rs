pub(crate) mod attempt;
pub(crate) mod response;
pub(super) mod transport;

pub(crate) use attempt::{AttemptCaller, UpstreamCaller};
