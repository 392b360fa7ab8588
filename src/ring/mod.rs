pub mod modular;
pub mod ntt;
pub mod poly;
pub mod rns;

pub use modular::{barrett_reduce, barrett_constant, mod_mul, mod_add, mod_sub, mod_neg, mod_pow, mod_inv, center, reduce_signed, is_prime};
pub use ntt::{make_plan, NttPoly};
pub use poly::CoeffPoly;
pub use rns::{RnsBasis, RnsPoly};
