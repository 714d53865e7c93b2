//! Request retry state machine.
//!
//! Each gateway call owns one machine. The retry budget is encoded in the
//! transitions themselves: a 401 is survivable exactly once.
//!
//! ```text
//! ┌─────────────┐  Rejected   ┌─────────────┐  Rejected   ┌──────────────┐
//! │ Authorized  │ ──────────► │ Refreshing  │ ──────────► │ Unauthorized │
//! └─────────────┘             └─────────────┘             └──────────────┘
//!       ▲   │ Accepted              │ Accepted              (terminal:
//!       └───┘◄──────────────────────┘                        teardown)
//! ```

use rust_fsm::*;

// Generates a module `request_machine` with State/Input enums and the
// StateMachine type alias.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub request_machine(Authorized)

    Authorized => {
        Accepted => Authorized,
        Rejected => Refreshing
    },
    Refreshing => {
        Accepted => Authorized,
        Rejected => Unauthorized
    }
}

// Re-export the generated types with clearer names
pub use request_machine::Input as RequestMachineInput;
pub use request_machine::State as RequestMachineState;
pub use request_machine::StateMachine as RequestMachine;
