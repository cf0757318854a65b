mod msg_block;
mod worker_info;
