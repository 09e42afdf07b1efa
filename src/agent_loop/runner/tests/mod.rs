use super::{SessionLoop, SessionRequest};

mod support;

mod resume_flow;
