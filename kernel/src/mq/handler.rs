use crate::mq::ErrorOperation;
use std::future::Future;
use std::pin::Pin;

pub type HandlerResult =
    Pin<Box<dyn Future<Output = error_stack::Result<(), ErrorOperation>> + Send>>;

/// Work a queue worker runs for every message, given the shared module `M`.
pub trait Handler<M, T>: 'static + Clone + Sync + Send {
    fn call(self, module: M, data: T) -> HandlerResult;
}

impl<Fn, Res, M, T> Handler<M, T> for Fn
where
    Fn: 'static + Clone + Sync + Send + FnOnce(M, T) -> Res,
    Res: Future<Output = error_stack::Result<(), ErrorOperation>> + Send + 'static,
    M: 'static + Send,
    T: 'static + Send,
{
    fn call(self, module: M, data: T) -> HandlerResult {
        Box::pin(self(module, data))
    }
}

/// Type-erased handler shared between worker tasks.
pub type SharedHandler<M, T> = std::sync::Arc<dyn Fn(M, T) -> HandlerResult + Sync + Send>;

pub fn share_handler<M, T, H>(handler: H) -> SharedHandler<M, T>
where
    H: Handler<M, T>,
{
    std::sync::Arc::new(move |module, data| handler.clone().call(module, data))
}
