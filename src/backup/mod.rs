pub mod aggregator;
pub mod backup_config;
pub mod copy_engine;
pub mod destination;
pub mod discovery;
pub mod file_ext;
pub mod log_writer;
pub mod mirror;
pub mod result_error;
pub mod session;
pub mod source_roots;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
