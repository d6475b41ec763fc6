// Auth module: challenge-response handshake with the band

pub mod authenticator;
pub mod flag;
pub mod frame;
pub mod session;

pub use authenticator::{AuthError, AuthOptions, Authenticator, CompletionMode};
pub use flag::{AuthorizationFlag, AUTHORIZED_KEY};
pub use frame::{AuthCommand, AuthResponse, AuthStatus};
pub use session::{AuthSession, AuthState, Transition};
