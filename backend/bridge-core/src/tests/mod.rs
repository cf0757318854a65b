mod cache;
mod channel;
mod supervisor;
mod trust;
