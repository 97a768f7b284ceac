//! Seed DApps exercising spec §8's end-to-end scenarios end to end
//! through `avm::DappExecutor`, the same role the teacher's `examples`
//! crate plays for its compiled RISC-V programs — except these are
//! `EntryPoint` closures rather than ELF binaries, since this repo's
//! DApp executor drives an entry point directly rather than interpreting
//! transformed bytecode (see `avm::dapp`'s module doc).

pub mod adder;
pub mod counter;
pub mod echo;

pub use adder::dapp as adder_dapp;
pub use counter::dapp as counter_dapp;
pub use echo::dapp as echo_dapp;
