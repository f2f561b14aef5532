pub mod compiler_messages;
pub mod template_tree;
