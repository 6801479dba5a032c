#[derive(Debug, Display, Error, From)]
pub enum SquallError {
    /// A waiter's deadline elapsed while it was still queued for admission.
    #[from(skip)]
    #[display("semaphore {} timed out", _0)]
    SemaphoreTimedOut(#[error(not(source))] String),

    /// The admission wait queue was full when the read arrived.
    #[from(skip)]
    #[display("{}: reader queue overload", _0)]
    SemaphoreOverloaded(#[error(not(source))] String),

    /// The semaphore was forcibly failed; carries the failure text.
    #[from(skip)]
    #[display("{}", _0)]
    SemaphoreBroken(#[error(not(source))] String),

    /// The semaphore was shut down while the read was waiting.
    #[from(skip)]
    #[display("{} was stopped", _0)]
    SemaphoreStopped(#[error(not(source))] String),

    #[from(skip)]
    #[display("internal error: {}", _0)]
    InternalError(#[error(not(source))] String),

    #[display("i/o error: {}", _0)]
    IoError(std::io::Error),
}

pub type SquallResult<T> = Result<T, SquallError>;
