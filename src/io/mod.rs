pub mod fasta;
