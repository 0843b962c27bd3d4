use crate::engine::Engine;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) engine: Engine,
}
