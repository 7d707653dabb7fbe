pub mod gate;
pub mod notify;
pub mod directory;
pub mod slots;
pub mod relations;
pub mod commit;
pub mod resolver;
pub mod sessions;
pub mod controller;
pub mod listing;

pub use gate::*;
pub use notify::*;
pub use directory::*;
pub use slots::*;
pub use relations::*;
pub use commit::*;
pub use resolver::*;
pub use sessions::*;
pub use controller::*;
pub use listing::*;
