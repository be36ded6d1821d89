/// Authentication and authorization utilities
///
/// - `guards`: the ordered admin guard chain and the capability set
/// - `jwt`: access-token creation and validation
/// - `password`: Argon2id hashing (one-way, used as a black box)

pub mod guards;
pub mod jwt;
pub mod password;
