pub mod p7m_inspect_tool;
pub mod p7m_open_tool;
pub mod p7m_reset_tool;
pub mod p7m_save_tool;
