pub mod salted_hash;
