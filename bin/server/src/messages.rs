//! Fixed user-facing texts.

use larn_relay_reply::{QuickReply, build_quick_reply};

pub const WELCOME: &str = "สวัสดีค่ะ หลานเองค่ะ 😊 มีเรื่องไหนเกี่ยวกับโทรศัพท์หรือแอปที่สงสัย \
พิมพ์ถามหลานได้เลยนะคะ หลานจะค่อย ๆ อธิบายให้ทีละขั้นตอนค่ะ";

pub const EXAMPLES: [&str; 3] = [
    "ตัวอย่างคำถาม: \"ทำยังไงให้ตัวหนังสือในโทรศัพท์ใหญ่ขึ้น\"",
    "ตัวอย่างคำถาม: \"ส่งรูปให้ลูกทางไลน์ทำยังไง\"",
    "ตัวอย่างคำถาม: \"ข่าวนี้จริงไหม\" แล้ววางข้อความข่าวที่ได้รับมา",
];

pub const TUTORIAL: &str = "อยากให้หลานช่วยดูว่าข่าวไหนจริงหรือปลอม ให้กดค้างที่ข้อความข่าว \
เลือก \"แชร์\" แล้วส่งมาที่แชทนี้ได้เลยค่ะ ดูวิธีทำในวิดีโอด้านล่างนะคะ 👇";

pub const TUTORIAL_VIDEO_URL: &str =
    "https://storage.googleapis.com/smooth-brain-bucket/ShareChat.mov";

pub const TUTORIAL_PREVIEW_URL: &str =
    "https://storage.googleapis.com/smooth-brain-bucket/Untitled%20design.png";

pub const NOTHING_MORE: &str = "ไม่มีข้อความให้อ่านต่อแล้วค่ะ 🤗";

pub const APOLOGY: &str = "ขอโทษค่ะ ตอนนี้หลานตอบไม่ได้ รบกวนลองถามใหม่อีกครั้งนะคะ 🙏";

/// Suggestions shown when nothing better is available.
pub const DEFAULT_SUGGESTIONS: [&str; 8] = [
    "เพิ่มขนาดตัวอักษร",
    "ตั้งค่าการแจ้งเตือนให้มีเสียงดังขึ้น",
    "วิธีถ่ายภาพหน้าจอ",
    "จะส่งรูปภาพทางไลน์",
    "วิธีตั้งนาฬิกาปลุก",
    "เชื่อม WiFi กับโทรศัพท์",
    "ลบแอปพลิเคชัน",
    "เปิดใช้งานโหมดประหยัดแบตเตอรี่",
];

#[must_use]
pub fn default_quick_reply() -> QuickReply {
    build_quick_reply(DEFAULT_SUGGESTIONS)
}
