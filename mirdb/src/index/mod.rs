pub mod codec;
pub mod db;
pub mod kmer;
pub mod normalize;
