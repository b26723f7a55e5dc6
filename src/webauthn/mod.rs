pub mod accounts;
pub mod ceremony;
pub mod challenge;
pub mod options;
pub mod relying_party;
pub mod verifier;

pub use accounts::*;
pub use ceremony::*;
pub use challenge::*;
pub use options::*;
pub use relying_party::*;
pub use verifier::*;
