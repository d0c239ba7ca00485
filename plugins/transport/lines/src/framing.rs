/// Один кадр, извлечённый из байтового потока.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Содержимое строки без `\n` и завершающего `\r`.
    Line(Vec<u8>),
    /// Строка длиннее `max_length`; её байты отброшены.
    TooLong(usize),
}

/// Разбивает поток на строки по `\n`.
///
/// Пустые строки пропускаются. Строка длиннее `max_length` (0 = без
/// ограничения) не буферизуется целиком: её хвост отбрасывается по мере
/// чтения, а при встрече `\n` возвращается `Frame::TooLong`.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    max_length: usize,
    discarded: Option<usize>,
}

impl LineDecoder {
    pub fn new(max_length: usize) -> Self {
        Self { max_length, discarded: None }
    }

    /// Следующий кадр из `buf`; потреблённые байты удаляются из буфера.
    /// None = нужна ещё порция данных.
    pub fn decode(&mut self, buf: &mut Vec<u8>) -> Option<Frame> {
        loop {
            let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
                if self.max_length > 0 && buf.len() > self.max_length {
                    *self.discarded.get_or_insert(0) += buf.len();
                    buf.clear();
                }
                return None;
            };

            let mut line: Vec<u8> = buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if let Some(frame) = self.frame(line) {
                return Some(frame);
            }
        }
    }

    /// Остаток буфера на конце потока: последняя строка без `\n`.
    pub fn finish(&mut self, buf: &mut Vec<u8>) -> Option<Frame> {
        let mut line = std::mem::take(buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        self.frame(line)
    }

    fn frame(&mut self, line: Vec<u8>) -> Option<Frame> {
        if let Some(discarded) = self.discarded.take() {
            return Some(Frame::TooLong(discarded + line.len()));
        }
        if self.max_length > 0 && line.len() > self.max_length {
            return Some(Frame::TooLong(line.len()));
        }
        if line.is_empty() {
            return None;
        }
        Some(Frame::Line(line))
    }
}

/// Кадр для записи: payload + `\n`.
pub fn encode_line(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.extend_from_slice(payload);
    buf.push(b'\n');
    buf
}
