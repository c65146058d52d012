mod approval;
mod chat;
