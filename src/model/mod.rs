pub mod byte_array_allele;
pub mod location;
pub mod sample_record;
pub mod variant_context;
pub mod variant_context_utils;
