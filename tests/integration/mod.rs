mod common;
mod fault_injection;
mod file_backed;
mod soundness;
