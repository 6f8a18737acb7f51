use alloy_primitives::{U256, U512};
use anyhow::{Result, bail};

use crate::{basic_elements::keys::Key, types::CLType};

use super::args::Args;

/// Reads one value of type `T`, checking it against the declared `CLType`.
pub trait NextArg<T> {
    fn next_arg(&mut self, cl_type: &CLType) -> Result<T>;
}

macro_rules! impl_next_arg {
    ($ty:ty, $cl_type:pat, $reader:ident) => {
        impl NextArg<$ty> for Args {
            fn next_arg(&mut self, cl_type: &CLType) -> Result<$ty> {
                match cl_type {
                    $cl_type => self.$reader(),
                    other => bail!(
                        "Type mismatch: Expected {:?}, but got request for {}",
                        other,
                        stringify!($ty)
                    ),
                }
            }
        }
    };
}

impl_next_arg!(u8, CLType::U8, next_u8);
impl_next_arg!(u32, CLType::U32, next_u32);
impl_next_arg!(u64, CLType::U64, next_u64);
impl_next_arg!(bool, CLType::Bool, next_bool);
impl_next_arg!(String, CLType::String, next_string);
impl_next_arg!(U256, CLType::U256, next_u256);
impl_next_arg!(U512, CLType::U512, next_u512);
impl_next_arg!(Key, CLType::Key, next_key);

impl NextArg<Vec<Key>> for Args {
    fn next_arg(&mut self, cl_type: &CLType) -> Result<Vec<Key>> {
        match cl_type {
            CLType::List(inner) if **inner == CLType::Key => self.next_list(inner),
            other => bail!(
                "Type mismatch: Expected {:?}, but got request for Vec<Key>",
                other
            ),
        }
    }
}
