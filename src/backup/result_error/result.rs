use crate::backup::result_error::error::Error;
use crate::backup::result_error::{WithFnName, WithMsg};

pub type Result<T> = std::result::Result<T, Error>;

impl<R, S: Into<String>> WithFnName<S> for Result<R> {
    fn with_fn_name(self, fn_name: S) -> Self {
        self.map_err(|e| e.with_fn_name(fn_name))
    }
}

impl<R, S: Into<String>> WithMsg<S> for Result<R> {
    fn with_msg(self, msg: S) -> Self {
        self.map_err(|e| e.with_msg(msg))
    }
}

pub fn convert_error_vec(errors: Vec<Error>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}
