//! RC4 stream cipher, used by the V2 crypt filter and by the password
//! algorithms of every Standard security handler revision.

/// RC4 key for encryption/decryption
#[derive(Debug, Clone)]
pub struct Rc4Key {
    pub key: Vec<u8>,
}

impl Rc4Key {
    pub fn from_slice(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    /// The same key with every byte XORed with `value`, as used by the
    /// 19 extra passes of revision 3 and later.
    pub fn xored(&self, value: u8) -> Self {
        Self {
            key: self.key.iter().map(|byte| byte ^ value).collect(),
        }
    }
}

/// RC4 cipher state
pub struct Rc4 {
    s: [u8; 256],
    i: usize,
    j: usize,
}

impl Rc4 {
    /// Create a new RC4 cipher with the given key
    pub fn new(key: &Rc4Key) -> Self {
        let mut s = [0u8; 256];
        for (i, byte) in s.iter_mut().enumerate() {
            *byte = i as u8;
        }

        // An empty key degenerates to the identity schedule
        if !key.key.is_empty() {
            let mut j = 0usize;
            for i in 0..256 {
                j = (j + s[i] as usize + key.key[i % key.key.len()] as usize) % 256;
                s.swap(i, j);
            }
        }

        Self { s, i: 0, j: 0 }
    }

    /// Process data in place (encryption and decryption are the same)
    pub fn process_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = (self.i + 1) % 256;
            self.j = (self.j + self.s[self.i] as usize) % 256;
            self.s.swap(self.i, self.j);

            let k = self.s[(self.s[self.i] as usize + self.s[self.j] as usize) % 256];
            *byte ^= k;
        }
    }

    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut output = data.to_vec();
        self.process_in_place(&mut output);
        output
    }
}

/// One-shot RC4 over `data`
pub fn rc4_crypt(key: &Rc4Key, data: &[u8]) -> Vec<u8> {
    Rc4::new(key).process(data)
}
