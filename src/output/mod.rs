pub mod vcf_writer;
