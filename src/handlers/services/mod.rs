// handlers/services - service data source administration
//
// Every route here runs under the integrated-cms prefix, so the request
// context is always the default tenant.

pub mod auto_detect;
pub mod create;
pub mod delete;
pub mod list;
pub mod show;

pub use auto_detect::auto_detect;
pub use create::create;
pub use delete::delete;
pub use list::list;
pub use show::show;
