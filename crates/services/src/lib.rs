#![forbid(unsafe_code)]

pub mod app_services;
pub mod bank;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod resume;
pub mod session;
pub mod transport;

pub use tutor_core::Clock;

pub use app_services::TutorServices;
pub use bank::FallbackBank;
pub use content::ContentProvider;
pub use dispatch::{Dispatch, Dispatcher, IncomingEvent};
pub use error::{ContentError, DispatchError, GenerateError, SessionError};
pub use generator::{GeneratorConfig, OpenAiGenerator, TextGenerator};
pub use resume::ResumeCoordinator;
pub use session::{EphemeralSession, SessionKind, SessionManager};
pub use transport::{Messenger, TransportError};
