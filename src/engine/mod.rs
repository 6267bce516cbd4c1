pub mod extract_engine;
pub mod gnarly_genotyper;
pub mod locus_assembler;
pub mod sample_merger;
