pub mod args;
pub mod cl_value;
pub mod deploy;
pub mod keys;
pub mod next_arg;
pub mod serializers;
