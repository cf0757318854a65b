mod bootstrap;
mod error;
mod protocol;
mod roundtrip;
mod stub_worker;
mod supervisor;
